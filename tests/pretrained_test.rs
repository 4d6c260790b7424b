//! Runs against real hubs and downloaded models. Needs network access and
//! `easynlp model download google-bert/bert-base-cased` beforehand.

use easynlp::config::EasyConfig;
use easynlp::easy::EasyWordEmbeddings;
use easynlp::result::DetailLevel;

#[test]
#[ignore]
fn bert_embeds_every_word() {
    let config = EasyConfig::default();
    let mut embeddings = EasyWordEmbeddings::from_config(&config).unwrap();

    let results = embeddings
        .embed_text("Paris is the capital of France", "bert-base-cased")
        .unwrap();
    let m = results[0].token_embeddings().unwrap();
    assert_eq!(m.nrows(), 6);
    assert_eq!(m.ncols(), 768);

    let dict = results[0].to_dict(DetailLevel::Medium).unwrap();
    assert_eq!(dict["Paris"]["word_idx"], serde_json::json!(1));
}

#[test]
#[ignore]
fn flair_glove_resolves_to_static_vectors() {
    let config = EasyConfig::default();
    let mut embeddings = EasyWordEmbeddings::from_config(&config).unwrap();

    let results = embeddings.embed_text("the cat sat", "glove").unwrap();
    assert_eq!(results[0].token_embeddings().unwrap().ncols(), 100);
}
