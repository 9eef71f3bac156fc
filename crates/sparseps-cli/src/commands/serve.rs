//! Runs one parameter server rank.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use sparseps_core::TrainingRule;
use sparseps_rpc::{PsServer, PsService};
use tracing::info;

/// Run one parameter server rank until it receives a shutdown request.
#[derive(Args, Debug, Clone)]
pub struct ServeCommand {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0:9000", env = "SPARSEPS_ADDR")]
    pub addr: String,

    /// Rank of this server within the job
    #[arg(long, default_value = "0", env = "SPARSEPS_RANK")]
    pub rank: usize,

    /// Path to a training rule JSON file; defaults apply when omitted
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

impl ServeCommand {
    pub async fn run(&self) -> Result<()> {
        let rule = self.load_rule()?;
        info!(rank = self.rank, addr = %self.addr, "starting parameter server");

        let server = PsServer::bind(&self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        let service = Arc::new(PsService::new(Arc::new(rule), self.rank));
        server.run(service).await?;

        info!(rank = self.rank, "parameter server stopped");
        Ok(())
    }

    fn load_rule(&self) -> Result<TrainingRule> {
        match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("failed to parse {}", path.display()))
            }
            None => Ok(TrainingRule::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_rule_defaults_without_config() {
        let cmd = ServeCommand {
            addr: "127.0.0.1:0".to_string(),
            rank: 0,
            config: None,
        };
        let rule = cmd.load_rule().unwrap();
        assert_eq!(rule.dense.learning_rate, TrainingRule::default().dense.learning_rate);
    }

    #[test]
    fn test_load_rule_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"dense": {{"optimizer": "AdamW", "learning_rate": 0.001}}}}"#
        )
        .unwrap();

        let cmd = ServeCommand {
            addr: "127.0.0.1:0".to_string(),
            rank: 0,
            config: Some(file.path().to_path_buf()),
        };
        let rule = cmd.load_rule().unwrap();
        assert_eq!(rule.dense.optimizer, "AdamW");
        assert_eq!(rule.dense.learning_rate, 0.001);
    }

    #[test]
    fn test_load_rule_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let cmd = ServeCommand {
            addr: "127.0.0.1:0".to_string(),
            rank: 0,
            config: Some(file.path().to_path_buf()),
        };
        assert!(cmd.load_rule().is_err());
    }
}
