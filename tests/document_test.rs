mod helpers;

use easynlp::config::DocumentConfig;
use easynlp::easy::{DocumentMethod, EasyDocumentEmbeddings, ALL_METHODS};
use easynlp::hub::ModelReference;
use easynlp::result::DetailLevel;
use easynlp::Error;

fn small_config() -> DocumentConfig {
    let mut config = DocumentConfig::default();
    config.rnn.hidden_size = 16;
    config.rnn.reproject_words_dimension = Some(8);
    config
}

fn glove() -> Vec<ModelReference> {
    vec!["glove".into()]
}

#[test]
fn pooled_document_vector_is_the_token_mean() {
    let (resolver, _) = helpers::test_resolver();
    let docs =
        EasyDocumentEmbeddings::new(&resolver, &glove(), &[DocumentMethod::Pool], &small_config())
            .unwrap();

    let results = docs.embed_pool("a cat").unwrap();
    let vector = results[0].sentence_embeddings().unwrap();
    assert_eq!(vector.len(), helpers::STATIC_DIM);
    // Tokens carry 101.0 and 102.0.
    assert!(vector.iter().all(|v| (v - 101.5).abs() < 1e-5));
    // Word vectors stay attached next to the document vector.
    assert_eq!(
        results[0].token_embeddings().unwrap().dim(),
        (2, helpers::STATIC_DIM)
    );

    let dict = results[0].to_dict(DetailLevel::Low).unwrap();
    assert_eq!(
        dict["sentence_embeddings"].as_array().unwrap().len(),
        helpers::STATIC_DIM
    );
}

#[test]
fn rnn_document_vector_has_hidden_size() {
    let (resolver, _) = helpers::test_resolver();
    let docs = EasyDocumentEmbeddings::new(&resolver, &glove(), ALL_METHODS, &small_config())
        .unwrap();

    let results = docs.embed_rnn(vec!["a cat sat", "the dog"]).unwrap();
    for result in &results {
        let vector = result.sentence_embeddings().unwrap();
        assert_eq!(vector.len(), 16);
        assert!(vector.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn rnn_is_deterministic_for_a_seed() {
    let (resolver, _) = helpers::test_resolver();
    let config = small_config();
    let a = EasyDocumentEmbeddings::new(&resolver, &glove(), &[DocumentMethod::Rnn], &config)
        .unwrap();
    let b = EasyDocumentEmbeddings::new(&resolver, &glove(), &[DocumentMethod::Rnn], &config)
        .unwrap();

    let va = a.embed_rnn("the cat sat").unwrap()[0].sentence_embeddings();
    let vb = b.embed_rnn("the cat sat").unwrap()[0].sentence_embeddings();
    assert_eq!(va, vb);
}

#[test]
fn unloaded_method_is_an_error() {
    let (resolver, _) = helpers::test_resolver();
    let docs =
        EasyDocumentEmbeddings::new(&resolver, &glove(), &[DocumentMethod::Pool], &small_config())
            .unwrap();

    let err = docs.embed_rnn("a cat").unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn methods_and_models_are_required() {
    let (resolver, _) = helpers::test_resolver();

    let err = EasyDocumentEmbeddings::new(&resolver, &glove(), &[], &small_config()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = EasyDocumentEmbeddings::new(&resolver, &[], ALL_METHODS, &small_config()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn both_methods_share_one_load() {
    let (resolver, recorded) = helpers::test_resolver();
    let models: Vec<ModelReference> = vec!["glove".into(), "bert-base-cased".into()];
    let docs = EasyDocumentEmbeddings::new(&resolver, &models, ALL_METHODS, &small_config()).unwrap();

    assert_eq!(recorded.builds.borrow().len(), 2);
    let pooled = docs.embed_pool("a dog").unwrap();
    assert_eq!(
        pooled[0].sentence_embeddings().unwrap().len(),
        helpers::STATIC_DIM + helpers::TRANSFORMER_DIM
    );
}

#[test]
fn document_methods_flatten_with_detail() {
    let (resolver, _) = helpers::test_resolver();
    let docs = EasyDocumentEmbeddings::new(&resolver, &glove(), ALL_METHODS, &small_config())
        .unwrap();

    let pooled = docs
        .embed_pool_with_detail(vec!["a cat", "the dog"], DetailLevel::Low)
        .unwrap();
    assert_eq!(pooled.len(), 2);
    assert_eq!(
        pooled[1]["sentence_embeddings"],
        serde_json::json!(vec![101.5f32; helpers::STATIC_DIM])
    );

    let rnn = docs
        .embed_rnn_with_detail("a cat sat", DetailLevel::High)
        .unwrap();
    assert_eq!(rnn[0]["sentence_embeddings"].as_array().unwrap().len(), 16);
    assert!(rnn[0].contains_key("sentence"));
    assert_eq!(rnn[0]["sat"]["word_idx"], serde_json::json!(3));
}

#[test]
fn flattening_an_unloaded_method_fails() {
    let (resolver, _) = helpers::test_resolver();
    let docs =
        EasyDocumentEmbeddings::new(&resolver, &glove(), &[DocumentMethod::Rnn], &small_config())
            .unwrap();
    let err = docs
        .embed_pool_with_detail("a cat", DetailLevel::Low)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
