use clap::{Args, Subcommand};
use nw_core::{ArticleStatus, Result};
use std::collections::BTreeMap;

use crate::pipeline::{IngestPipeline, IngestReport};
use crate::sources::SourceMetadata;

#[derive(Args)]
pub struct FeedArgs {
    #[command(subcommand)]
    pub command: FeedCommands,
}

#[derive(Subcommand)]
pub enum FeedCommands {
    /// Fetch and store one round of articles
    Run {
        /// Restrict to a language or one source, e.g. `es` or `es/clarin`
        source: Option<String>,
    },
    /// List configured sources
    List,
}

pub async fn handle_command(args: FeedArgs, pipeline: &IngestPipeline) -> Result<()> {
    match args.command {
        FeedCommands::Run { source } => {
            let report = pipeline.run_once(source.as_deref()).await?;
            print_report(&report);
        }
        FeedCommands::List => {
            let metadata: Vec<(SourceMetadata, Vec<String>)> = pipeline
                .sources()
                .iter()
                .map(|s| (s.metadata(), s.cli_names()))
                .collect();
            for (language, lines) in group_by_language(&metadata) {
                println!("{}:", language);
                for line in lines {
                    println!("  - {}", line);
                }
            }
        }
    }
    Ok(())
}

fn group_by_language(sources: &[(SourceMetadata, Vec<String>)]) -> BTreeMap<&'static str, Vec<String>> {
    let mut grouped: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    for (meta, names) in sources {
        let code = meta.language.code();
        let selector = names
            .first()
            .map(|n| format!("{}/{}", code, n))
            .unwrap_or_else(|| code.to_string());
        grouped
            .entry(code)
            .or_default()
            .push(format!("{} ({:?}) → {}", meta.name, meta.kind, selector));
    }
    grouped
}

pub fn status_emoji(status: &ArticleStatus) -> &'static str {
    match status {
        ArticleStatus::New => "🆕",
        ArticleStatus::Updated => "📝",
        ArticleStatus::Merged { .. } => "🔗",
        ArticleStatus::Unchanged => "⏭️",
    }
}

pub fn print_report(report: &IngestReport) {
    println!("Fetched {} articles", report.fetched);
    println!("  {} {} new", status_emoji(&ArticleStatus::New), report.new);
    println!("  {} {} updated", status_emoji(&ArticleStatus::Updated), report.updated);
    println!(
        "  {} {} merged",
        status_emoji(&ArticleStatus::Merged { into: String::new() }),
        report.merged
    );
    println!("  {} {} unchanged", status_emoji(&ArticleStatus::Unchanged), report.unchanged);
    println!("  🗑️ {} skipped", report.skipped);
    if report.notified > 0 {
        println!("  📣 {} notifications", report.notified);
    }
    for error in &report.errors {
        eprintln!("  ❌ {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;
    use nw_core::Language;

    fn meta(name: &str, kind: SourceKind, language: Language) -> SourceMetadata {
        SourceMetadata {
            name: name.to_string(),
            kind,
            language,
        }
    }

    #[test]
    fn test_group_by_language() {
        let sources = vec![
            (meta("Clarín", SourceKind::Feed, Language::Es), vec!["clarin".to_string()]),
            (meta("BBC News", SourceKind::Feed, Language::En), vec!["bbc-news".to_string()]),
            (meta("NewsAPI AR", SourceKind::Rest, Language::Es), vec!["newsapi".to_string()]),
        ];
        let grouped = group_by_language(&sources);
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec!["en", "es"]);
        assert_eq!(grouped["es"].len(), 2);
        assert!(grouped["es"][0].ends_with("es/clarin"));
    }
}
