mod helpers;

use easynlp::embedding::BackendKind;
use easynlp::hub::{HubOrigin, ModelRecord, ModelReference};
use easynlp::Error;

#[test]
fn flair_key_with_static_table_loads_static_embeddings() {
    let (mut resolver, recorded) = helpers::test_resolver();

    let backend = resolver.resolve(&"glove".into()).unwrap();
    assert_eq!(backend.kind(), BackendKind::StaticWord);
    assert_eq!(backend.name(), "glove");
    assert_eq!(*recorded.builds.borrow(), vec!["static:glove"]);
    // The Hugging Face hub is never consulted once Flair has a hit.
    assert!(recorded.hf_queries.borrow().is_empty());
}

#[test]
fn flair_key_without_static_table_falls_back_to_contextual() {
    let (mut resolver, recorded) = helpers::test_resolver();

    let backend = resolver.resolve(&"news-forward".into()).unwrap();
    assert_eq!(backend.kind(), BackendKind::Contextual);
    assert_eq!(backend.name(), "news-forward");
    assert_eq!(*recorded.builds.borrow(), vec!["contextual:news-forward"]);
}

#[test]
fn key_missing_on_flair_resolves_on_hugging_face() {
    let (mut resolver, recorded) = helpers::test_resolver();

    let backend = resolver.resolve(&"bert-base-cased".into()).unwrap();
    assert_eq!(backend.kind(), BackendKind::Transformer);
    assert_eq!(backend.name(), "google-bert/bert-base-cased");
    assert_eq!(
        *recorded.flair_queries.borrow(),
        vec![("bert-base-cased".to_string(), true)]
    );
    assert_eq!(
        *recorded.hf_queries.borrow(),
        vec![("bert-base-cased".to_string(), true)]
    );
}

#[test]
fn unknown_key_is_model_not_found() {
    let (mut resolver, recorded) = helpers::test_resolver();

    let err = resolver.resolve(&"no-such-model".into()).unwrap_err();
    match &err {
        Error::ModelNotFound { key } => assert_eq!(key, "no-such-model"),
        other => panic!("expected ModelNotFound, got {other:?}"),
    }
    assert!(err.to_string().contains("no-such-model"));
    assert!(recorded.builds.borrow().is_empty());
    assert!(!resolver.is_cached(&"no-such-model".into()));
}

#[test]
fn hugging_face_record_skips_search() {
    let (mut resolver, recorded) = helpers::test_resolver();
    let reference: ModelReference = ModelRecord::new("my-org/custom-bert", HubOrigin::HuggingFace).into();

    let backend = resolver.resolve(&reference).unwrap();
    assert_eq!(backend.kind(), BackendKind::Transformer);
    assert_eq!(backend.name(), "my-org/custom-bert");
    assert!(recorded.flair_queries.borrow().is_empty());
    assert!(recorded.hf_queries.borrow().is_empty());
}

#[test]
fn flair_record_strips_only_the_leading_provider_prefix() {
    // A character-set strip would eat the leading "li" of "lion".
    let (mut resolver, recorded) = helpers::resolver_with(&[], &[], &["lion"]);
    let reference: ModelReference = ModelRecord::new("flairNLP/lion", HubOrigin::Flair).into();

    let backend = resolver.resolve(&reference).unwrap();
    assert_eq!(backend.name(), "lion");
    assert_eq!(*recorded.builds.borrow(), vec!["static:lion"]);
}

#[test]
fn flair_record_without_prefix_keeps_its_name() {
    let (mut resolver, _) = helpers::resolver_with(&[], &[], &[]);
    let reference: ModelReference = ModelRecord::new("someone/forward", HubOrigin::Flair).into();

    let backend = resolver.resolve(&reference).unwrap();
    assert_eq!(backend.name(), "someone/forward");
    assert_eq!(backend.kind(), BackendKind::Contextual);
}

#[test]
fn flair_wins_when_both_hubs_match() {
    let (mut resolver, recorded) =
        helpers::resolver_with(&["flairNLP/glove"], &["stanford/glove"], &["glove"]);

    let backend = resolver.resolve(&"glove".into()).unwrap();
    assert_eq!(backend.kind(), BackendKind::StaticWord);
    assert!(recorded.hf_queries.borrow().is_empty());
}

#[test]
fn resolve_memoizes_per_reference() {
    let (mut resolver, recorded) = helpers::test_resolver();

    resolver.resolve(&"glove".into()).unwrap();
    resolver.resolve(&"glove".into()).unwrap();
    resolver.resolve(&"bert-base-cased".into()).unwrap();
    resolver.resolve(&"glove".into()).unwrap();

    assert_eq!(
        *recorded.builds.borrow(),
        vec!["static:glove", "transformer:google-bert/bert-base-cased"]
    );
    assert_eq!(recorded.flair_queries.borrow().len(), 2);
    assert_eq!(
        resolver.cached_references(),
        vec![ModelReference::from("bert-base-cased"), ModelReference::from("glove")]
    );
}

#[test]
fn build_bypasses_the_cache() {
    let (mut resolver, recorded) = helpers::test_resolver();

    resolver.resolve(&"glove".into()).unwrap();
    let fresh = resolver.build(&"glove".into()).unwrap();
    assert_eq!(fresh.name(), "glove");
    assert_eq!(recorded.builds.borrow().len(), 2);
    assert_eq!(resolver.cached_references().len(), 1);
}

#[test]
fn flair_name_loading_nowhere_reports_both_causes() {
    let factory = helpers::MockFactory::new(&[]).without_contextual(&["glove"]);
    let (mut resolver, _) = helpers::resolver_with_factory(&["flairNLP/glove"], &[], factory);

    let err = resolver.resolve(&"glove".into()).unwrap_err();
    match &err {
        Error::BackendUnavailable {
            model,
            static_error,
            contextual_error,
        } => {
            assert_eq!(model, "glove");
            assert!(static_error.contains("glove"));
            assert!(contextual_error.contains("contextual model glove not found"));
        }
        other => panic!("expected BackendUnavailable, got {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("static word embeddings"), "{msg}");
    assert!(msg.contains("contextual model"), "{msg}");
    assert!(!resolver.is_cached(&"glove".into()));
}
