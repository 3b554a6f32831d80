//! Checks against real providers. Run with `cargo test -- --ignored` and provider settings in
//! the environment or `.env`.

use sumdex::{
    config::{self, ConfigOverrides, EmbeddingProvider, LlmProvider},
    embedding,
    llm::{self, CompletionRequest},
};

fn live_config() -> config::Config {
    dotenvy::dotenv().ok();
    config::load_config(ConfigOverrides {
        folder_path: Some(".".into()),
        vector_db_path: Some(std::env::temp_dir().join("sumdex-live")),
        ..ConfigOverrides::default()
    })
    .expect("configuration from environment")
}

#[tokio::test]
#[ignore = "Requires a live embedding provider"]
async fn live_embedding_roundtrip() {
    let config = live_config();
    if config.embedding_provider == EmbeddingProvider::Local {
        eprintln!("EMBEDDING_PROVIDER=local; nothing live to check");
        return;
    }
    let client = embedding::build_embedding_client(&config).expect("embedding client");
    let vectors = client
        .generate_embeddings(vec!["sumdex live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected one embedding per input");
    assert_eq!(
        vectors[0].len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}

#[tokio::test]
#[ignore = "Requires a live generation provider"]
async fn live_completion_roundtrip() {
    let config = live_config();
    if config.llm_provider == LlmProvider::None {
        eprintln!("LLM_PROVIDER=none; nothing live to check");
        return;
    }
    let client = llm::build_completion_client(&config)
        .expect("completion client")
        .expect("provider configured");
    let answer = client
        .complete(CompletionRequest {
            model: config.generation_model.clone(),
            system: None,
            prompt: "Reply with the single word: ready".into(),
            max_tokens: Some(8),
            temperature: 0.0,
        })
        .await
        .expect("completion");
    assert!(!answer.is_empty());
}
