//! Pure image collection mutations.
//!
//! Nothing here touches the object store or the database. Requests are
//! resolved with `ImageUpdate::from_request`, then applied to the collection
//! read from the entity store.

use resort_core::models::ImageCollection;
use resort_core::AppError;

pub use resort_core::models::{ImageUpdate, ImageUpdateRequest};

/// Produce the collection that results from `update`.
///
/// Appends keep existing order and allow duplicates.
pub fn apply(current: &ImageCollection, update: &ImageUpdate) -> ImageCollection {
    match update {
        ImageUpdate::AppendOne(url) => current
            .iter()
            .cloned()
            .chain(std::iter::once(url.clone()))
            .collect(),
        ImageUpdate::AppendMany(urls) => current.iter().chain(urls.iter()).cloned().collect(),
        ImageUpdate::ReplaceAll(urls) => ImageCollection::new(urls.clone()),
        ImageUpdate::NoChange => current.clone(),
    }
}

/// Remove the image at `index`.
pub fn remove_at(current: &ImageCollection, index: usize) -> Result<ImageCollection, AppError> {
    if index >= current.len() {
        return Err(AppError::IndexOutOfRange {
            index,
            len: current.len(),
        });
    }
    Ok(current
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, url)| url.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(urls: &[&str]) -> ImageCollection {
        ImageCollection::from(urls.to_vec())
    }

    fn request(value: serde_json::Value) -> ImageUpdate {
        let req: ImageUpdateRequest = serde_json::from_value(value).unwrap();
        ImageUpdate::from_request(&req)
    }

    #[test]
    fn single_url_is_appended() {
        let next = apply(&collection(&["a", "b"]), &request(json!({ "imageUrl": "c" })));
        assert_eq!(next, collection(&["a", "b", "c"]));
    }

    #[test]
    fn many_urls_are_appended_in_order() {
        let next = apply(
            &collection(&["a", "b"]),
            &request(json!({ "images": ["c", "d"], "appendImages": true })),
        );
        assert_eq!(next, collection(&["a", "b", "c", "d"]));
    }

    #[test]
    fn array_without_flag_replaces() {
        let next = apply(&collection(&["a", "b"]), &request(json!({ "images": ["x"] })));
        assert_eq!(next, collection(&["x"]));
    }

    #[test]
    fn empty_array_leaves_collection_untouched() {
        let current = collection(&["a", "b"]);
        assert_eq!(apply(&current, &request(json!({ "images": [] }))), current);
    }

    #[test]
    fn duplicates_are_kept() {
        let next = apply(
            &collection(&["a"]),
            &ImageUpdate::AppendMany(vec!["a".to_string(), "a".to_string()]),
        );
        assert_eq!(next, collection(&["a", "a", "a"]));
    }

    #[test]
    fn single_then_many_equals_one_combined_append() {
        let start = collection(&["a"]);
        let stepwise = apply(
            &apply(&start, &ImageUpdate::AppendOne("b".to_string())),
            &ImageUpdate::AppendMany(vec!["c".to_string(), "d".to_string()]),
        );
        let combined = apply(
            &start,
            &ImageUpdate::AppendMany(vec!["b".to_string(), "c".to_string(), "d".to_string()]),
        );
        assert_eq!(stepwise, combined);
    }

    #[test]
    fn replace_is_idempotent() {
        let update = ImageUpdate::ReplaceAll(vec!["x".to_string(), "y".to_string()]);
        let once = apply(&collection(&["a"]), &update);
        assert_eq!(apply(&once, &update), once);
    }

    #[test]
    fn remove_at_drops_one_element() {
        let next = remove_at(&collection(&["a", "b", "c"]), 1).unwrap();
        assert_eq!(next, collection(&["a", "c"]));
    }

    #[test]
    fn remove_at_out_of_range_is_an_error() {
        let err = remove_at(&collection(&["a"]), 1).unwrap_err();
        assert!(matches!(err, AppError::IndexOutOfRange { index: 1, len: 1 }));

        let err = remove_at(&ImageCollection::default(), 0).unwrap_err();
        assert!(matches!(err, AppError::IndexOutOfRange { index: 0, len: 0 }));
    }
}
