//! Thumbnail refinement loop against the scripted port.

use crate::integration::{Call, MockPort};
use reelgen::error::RefinementError;
use reelgen::refinement::ThumbnailRefiner;
use std::sync::Arc;

#[tokio::test]
async fn refining_after_select_branches_from_the_selected_version() {
    let port = Arc::new(MockPort::new(&[]));
    let mut refiner = ThumbnailRefiner::new(port.clone());

    refiner.generate_initial("a cat").await.unwrap();
    refiner.refine("make it red").await.unwrap();
    refiner.select_version(0).unwrap();
    let entry = refiner.refine("make it blue").await.unwrap().clone();

    let history = refiner.history();
    assert_eq!(history.len(), 3);
    assert_eq!(entry.base_index, Some(0));
    assert_eq!(history.active_index(), Some(2));

    let initial = history.get(0).unwrap().image.as_str().to_string();
    let red = history.get(1).unwrap().image.as_str().to_string();
    assert_eq!(
        port.calls().last().unwrap(),
        &Call::Refine {
            prompt: "make it blue".to_string(),
            base: Some(initial),
        }
    );
    assert_ne!(history.get(2).unwrap().image.as_str(), red);
}

#[tokio::test]
async fn selecting_an_old_version_appends_at_the_tail() {
    let port = Arc::new(MockPort::new(&[]));
    let mut refiner = ThumbnailRefiner::new(port.clone());
    refiner.generate_initial("lighthouse").await.unwrap();
    refiner.refine("at dusk").await.unwrap();
    refiner.refine("with fog").await.unwrap();
    let before: Vec<_> = refiner.history().entries().to_vec();

    refiner.select_version(0).unwrap();
    refiner.refine("in winter").await.unwrap();

    let history = refiner.history();
    assert_eq!(history.len(), 4);
    assert_eq!(&history.entries()[..3], before.as_slice());
    assert_eq!(history.active_index(), Some(3));
    assert_eq!(history.get(3).unwrap().base_index, Some(0));
    match port.calls().last().unwrap() {
        Call::Refine { base, .. } => {
            assert_eq!(base.as_deref(), Some(before[0].image.as_str()))
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn failed_refinement_leaves_history_untouched() {
    let port = Arc::new(MockPort::new(&[]));
    let mut refiner = ThumbnailRefiner::new(port.clone());
    refiner.generate_initial("a cat").await.unwrap();
    refiner.refine("make it red").await.unwrap();

    port.fail_next_refinement("safety filter");
    let err = refiner.refine("make it scary").await.unwrap_err();

    assert!(matches!(err, RefinementError::Generation(_)));
    assert_eq!(refiner.history().len(), 2);
    assert_eq!(refiner.history().active_index(), Some(1));
}

#[tokio::test]
async fn refine_without_initial_image_is_rejected() {
    let port = Arc::new(MockPort::new(&[]));
    let mut refiner = ThumbnailRefiner::new(port.clone());

    let err = refiner.refine("anything").await.unwrap_err();
    assert!(matches!(err, RefinementError::NoActiveVersion));
    assert!(port.calls().is_empty());
}

#[tokio::test]
async fn generating_a_new_initial_image_starts_a_new_epoch() {
    let port = Arc::new(MockPort::new(&[]));
    let mut refiner = ThumbnailRefiner::new(port);
    refiner.generate_initial("first").await.unwrap();
    refiner.refine("tweak").await.unwrap();
    assert_eq!(refiner.history().epoch(), 1);

    refiner.generate_initial("second").await.unwrap();
    assert_eq!(refiner.history().len(), 1);
    assert_eq!(refiner.history().epoch(), 2);
    assert!(refiner.select_version(1).is_err());
}
