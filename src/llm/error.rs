//! Tipos de erro para o cliente de modelo de linguagem.
//!
//! Define [`LlmError`] com variantes para rate limiting, erros da API,
//! erros de rede e respostas JSON inválidas. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com o modelo de linguagem.
#[derive(Debug, Error)]
pub enum LlmError {
    /// O servidor retornou HTTP 429 (rate limit).
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Erro retornado pela API (ex.: 401 chave inválida, 500 erro interno).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// O modelo respondeu, mas o texto não contém um objeto JSON válido.
    #[error("invalid JSON in model output: {0}")]
    InvalidJson(String),

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
