use portal_core::{SeenSources, SourceId};

fn ids(raw: &[&str]) -> Vec<SourceId> {
    raw.iter().map(|id| SourceId::from(*id)).collect()
}

#[test]
fn reports_each_source_once_across_polls() {
    let mut seen = SeenSources::new();

    let first = seen.retain_new(ids(&["ZTF1", "ZTF2", "ZTF1"]), |id| id);
    assert_eq!(first, ids(&["ZTF1", "ZTF2"]));

    let second = seen.retain_new(ids(&["ZTF2", "ZTF3"]), |id| id);
    assert_eq!(second, ids(&["ZTF3"]));
    assert_eq!(seen.len(), 3);
    assert!(seen.contains(&SourceId::from("ZTF1")));
}

#[test]
fn empty_listing_changes_nothing() {
    let mut seen = SeenSources::new();
    assert!(seen.retain_new(Vec::<SourceId>::new(), |id| id).is_empty());
    assert!(seen.is_empty());
}
