//! Interface de terminal do GraphScribe: barra de progresso e saída colorida.
//!
//! Usa `indicatif` para a barra de progresso e `console` para cores.
//! O [`JobProgress`] acompanha visualmente a geração de um relatório.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use graphscribe::report::{Report, ReportStatus};

/// Indicador visual de progresso para a geração de um relatório.
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia a barra (0..100) com a descrição do job.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new(100);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
        pb.set_message(description.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a barra. Percentuais negativos indicam falha e são ignorados aqui.
    pub fn update(&self, stage: &str, percent: i32, message: &str) {
        if percent >= 0 {
            self.pb.set_position(percent.min(100) as u64);
        }
        self.pb.set_message(format!("{} {message}", self.yellow.apply_to(stage)));
    }

    /// Finaliza a barra e exibe o resultado final do relatório.
    pub fn complete(&self, report: &Report) {
        self.pb.finish_and_clear();
        match report.status {
            ReportStatus::Completed => {
                println!(
                    "  {} Report {} completed",
                    self.green.apply_to("✓"),
                    report.id
                );
            }
            _ => {
                let reason = report.error.as_deref().unwrap_or("unknown error");
                println!(
                    "  {} Report {} failed: {reason}",
                    self.red.apply_to("✗"),
                    report.id
                );
            }
        }
    }
}

/// Estilo da linha conforme o status do relatório.
pub fn status_style(status: ReportStatus) -> Style {
    match status {
        ReportStatus::Completed => Style::new().green().bold(),
        ReportStatus::Failed => Style::new().red().bold(),
        _ => Style::new().yellow(),
    }
}

/// Imprime um valor serializável como JSON, com um título colorido.
pub fn print_json<T: serde::Serialize>(title: &str, status: ReportStatus, value: &T) {
    println!("{}", status_style(status).apply_to(format!("─── {title} ───")));
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}
