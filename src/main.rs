use anyhow::Result;
use std::time::Instant;
use tourney_saves_to_sqlite::{
    bracket::{load_pick_orders, BracketData},
    cli::{Cli, Commands},
    etl::{import_saves, ImportOptions, Outcome},
    overrides::Overrides,
    query,
    schema::table_names,
    store::Store,
    validate,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse_args();

    match cli.command {
        Commands::Import {
            save_dir,
            output_db,
            force,
            overrides_dir,
            bracket,
            picks,
            jobs,
        } => {
            let start = Instant::now();

            let overrides = Overrides::load_dir(overrides_dir.as_deref())?;
            let bracket = BracketData::load(bracket.as_deref())?;
            let picks = load_pick_orders(picks.as_deref())?;

            let mut store = Store::open(&output_db)?;
            store.create_schema()?;

            let options = ImportOptions { force, jobs };
            let summary = import_saves(&mut store, &save_dir, &overrides, &bracket, &picks, &options)?;

            let elapsed = start.elapsed();
            println!(
                "\n{} loaded, {} skipped, {} failed into {:?} in {:.1}s",
                summary.loaded(),
                summary.skipped(),
                summary.failed(),
                output_db,
                elapsed.as_secs_f64()
            );
            if summary.draft_picks > 0 {
                println!("{} draft pick rows loaded", summary.draft_picks);
            }
            if summary.unmatched_overrides > 0 {
                println!("{} override entries matched nothing", summary.unmatched_overrides);
            }
            // Per-file failures are part of the summary, not the exit code
            for report in &summary.reports {
                match &report.outcome {
                    Outcome::Skipped { reason } => {
                        println!("  skipped {}: {}", report.file_name, reason)
                    }
                    Outcome::Failed { stage, reason } => {
                        println!("  FAILED {} at {}: {}", report.file_name, stage, reason)
                    }
                    Outcome::Loaded { .. } => {}
                }
            }
        }

        Commands::ListTables => {
            println!("Tables:\n");
            for name in table_names() {
                println!("  {}", name);
            }
        }

        Commands::Validate { db } => {
            let store = Store::open_read_only(&db)?;

            let gaps = validate::contiguity_gaps(&store)?;
            if gaps.is_empty() {
                println!("turn contiguity: ok");
            } else {
                println!("turn contiguity: {} series with gaps", gaps.len());
                for gap in &gaps {
                    println!(
                        "  {} match={} player={}{}: {} of turns {}..{} missing",
                        gap.table,
                        gap.match_id,
                        gap.player_id,
                        gap.key
                            .as_deref()
                            .map(|k| format!(" key={}", k))
                            .unwrap_or_default(),
                        gap.missing_turns(),
                        gap.min_turn,
                        gap.max_turn
                    );
                }
            }

            let orphans = validate::orphan_rows(&store)?;
            if orphans.is_empty() {
                println!("foreign keys: ok");
            } else {
                println!("foreign keys: {} dangling reference groups", orphans.len());
                for orphan in &orphans {
                    println!("  {}.{}: {} rows", orphan.table, orphan.column, orphan.rows);
                }
            }
        }

        Commands::Report { db } => {
            let store = Store::open_read_only(&db)?;

            println!("Matches:\n");
            for result in query::match_results(&store)? {
                println!(
                    "  #{} {} turns={} round={} winner={}",
                    result.match_id,
                    result.source_file,
                    result
                        .turns
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "?".to_string()),
                    result
                        .round
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "?".to_string()),
                    result.winner.as_deref().unwrap_or("unknown")
                );
            }

            println!("\nNation win rates:\n");
            for nation in query::nation_win_rates(&store)? {
                println!(
                    "  {:30} {}/{} decided ({} played)",
                    nation.nation, nation.wins, nation.decided, nation.matches
                );
            }

            println!("\nStandings:\n");
            for standing in query::participant_standings(&store)? {
                println!(
                    "  {:30} {} wins in {} matches",
                    standing.name, standing.wins, standing.matches
                );
            }
        }
    }

    Ok(())
}
