//! Embedding and rerank model recognition

use once_cell::sync::Lazy;

use super::rules::{Rule, RuleTable};

pub(super) static EMBEDDING_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![
        Rule::deny("rerankers", r"rerank|re-rank"),
        Rule::allow(
            "embedding-families",
            r"embed|^bge-|^e5-|^gte-|^m3e|^text-embedding|jina-clip|jina-embeddings|^voyage-|retrieval|^uae-|llm2vec",
        ),
    ])
});

pub(super) static RERANK_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new(vec![Rule::allow(
        "rerankers",
        r"rerank|re-rank|re-ranker|re-ranking|retriever",
    )])
});
