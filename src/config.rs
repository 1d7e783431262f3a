//! Configuração do GraphScribe carregada a partir de `graphscribe.toml`.
//!
//! A struct [`GraphScribeConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `ANTHROPIC_API_KEY` e `ZEP_API_KEY` têm precedência sobre o arquivo.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ReportError, Result};
use crate::graph::{self, ZepClient};
use crate::ingest::UpdaterSettings;
use crate::llm::{self, AnthropicClient};
use crate::retry::RetryPolicy;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "graphscribe.toml";

/// Configuração de nível superior carregada de `graphscribe.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphScribeConfig {
    /// Chave da API Anthropic.
    #[serde(default)]
    pub api_key: String,

    /// Identificador do modelo usado em todas as chamadas.
    #[serde(default = "default_model")]
    pub model: String,

    /// Chave da API do grafo de conhecimento.
    #[serde(default)]
    pub graph_api_key: String,

    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    /// Diretório raiz onde os relatórios são persistidos.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Máximo de tentativas por chamada ao grafo.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Orçamento de ferramentas por seção.
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls_per_section: usize,

    #[serde(default = "default_chat_max_rounds")]
    pub chat_max_rounds: usize,

    /// Intervalo mínimo entre envios de atividades, em milissegundos.
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_model() -> String {
    llm::client::DEFAULT_MODEL.to_string()
}

fn default_graph_base_url() -> String {
    graph::zep::DEFAULT_BASE_URL.to_string()
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

// Valor padrão para tentativas: 3.
fn default_max_retries() -> u32 {
    3
}

// Valor padrão para o atraso base: 2000ms.
fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_tool_calls() -> usize {
    5
}

fn default_chat_max_rounds() -> usize {
    3
}

fn default_send_interval_ms() -> u64 {
    500
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for GraphScribeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            graph_api_key: String::new(),
            graph_base_url: default_graph_base_url(),
            reports_dir: default_reports_dir(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_tool_calls_per_section: default_max_tool_calls(),
            chat_max_rounds: default_chat_max_rounds(),
            send_interval_ms: default_send_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl GraphScribeConfig {
    /// Carrega a configuração de `graphscribe.toml` no diretório atual.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;

        // Variáveis de ambiente têm precedência sobre o arquivo para as chaves.
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }
        if let Ok(key) = std::env::var("ZEP_API_KEY")
            && !key.is_empty()
        {
            config.graph_api_key = key;
        }

        Ok(config)
    }

    /// Lê um arquivo específico, sem consultar o ambiente.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<GraphScribeConfig>(&contents)?)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.max_retries,
            base_delay_ms: self.base_delay_ms,
        }
    }

    pub fn updater_settings(&self) -> UpdaterSettings {
        UpdaterSettings {
            send_interval: Duration::from_millis(self.send_interval_ms),
            retry: self.retry_policy(),
            queue_capacity: self.queue_capacity,
        }
    }

    /// Constrói o cliente do modelo. Falha se a chave estiver ausente.
    pub fn llm_client(&self) -> Result<AnthropicClient> {
        if self.api_key.is_empty() {
            return Err(ReportError::Config(
                "ANTHROPIC_API_KEY is not set".to_string(),
            ));
        }
        AnthropicClient::new(self.api_key.clone(), self.model.clone()).map_err(ReportError::from)
    }

    /// Constrói o cliente do grafo. Falha se a chave estiver ausente.
    pub fn graph_client(&self) -> Result<ZepClient> {
        if self.graph_api_key.is_empty() {
            return Err(ReportError::Config("ZEP_API_KEY is not set".to_string()));
        }
        ZepClient::new(self.graph_api_key.clone(), self.graph_base_url.clone())
            .map_err(ReportError::from)
    }
}
