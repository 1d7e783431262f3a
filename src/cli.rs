//! Interface de linha de comando do GraphScribe baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] e flags globais
//! (--model, --reports-dir, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// GraphScribe: relatórios fundamentados em grafos de conhecimento.
#[derive(Debug, Parser)]
#[command(name = "graphscribe", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Modelo a usar nesta sessão (sobrescreve o arquivo de configuração).
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Diretório onde os relatórios são persistidos.
    #[arg(long, global = true)]
    pub reports_dir: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Gera um relatório completo para uma simulação.
    Generate {
        #[arg(long)]
        simulation_id: String,

        #[arg(long)]
        graph_id: String,

        /// Requisito da simulação que o relatório deve responder.
        requirement: String,
    },

    /// Mostra o progresso persistido de um relatório.
    Status { id: String },

    /// Imprime o markdown de um relatório.
    Show { id: String },

    /// Lista relatórios, do mais recente ao mais antigo.
    List {
        #[arg(long)]
        simulation_id: Option<String>,

        #[arg(long, default_value_t = graphscribe::store::DEFAULT_LIST_LIMIT)]
        limit: usize,
    },

    /// Lista as seções já geradas de um relatório.
    Sections { id: String },

    /// Remove um relatório e todos os seus artefatos.
    Delete { id: String },

    /// Faz uma pergunta sobre o grafo.
    Chat {
        #[arg(long)]
        graph_id: String,

        #[arg(long)]
        requirement: String,

        /// Arquivo JSON com o histórico da conversa (lista de mensagens).
        #[arg(long)]
        history: Option<PathBuf>,

        message: String,
    },

    /// Envia um log de ações (JSONL) para o grafo como episódios.
    Ingest {
        #[arg(long)]
        simulation_id: String,

        #[arg(long)]
        graph_id: String,

        #[arg(long, default_value = "twitter")]
        platform: String,

        file: PathBuf,
    },
}
