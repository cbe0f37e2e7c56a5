use anyhow::Context;
use clap::Parser;
use reversalbot::ledger::Ledger;
use reversalbot::persistence::read_ledger;
use std::path::PathBuf;

/// Summarize the round-trips recorded in a ledger CSV file
#[derive(Debug, Parser)]
struct Args {
    /// Ledger file written by the bot
    #[arg(default_value = "testnet_ledger.csv")]
    ledger: PathBuf,

    /// Print every round-trip
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter("reversalbot=warn")
        .init();

    let entries = read_ledger(&args.ledger)
        .with_context(|| format!("Failed to read {}", args.ledger.display()))?;
    let ledger = Ledger::from_entries(entries);
    let trips = ledger.round_trips();

    println!("\n═══════════════════════════════════════════════════════");
    println!("                  LEDGER SUMMARY");
    println!("═══════════════════════════════════════════════════════\n");
    println!("File:                {}", args.ledger.display());
    println!("Entries:             {}", ledger.len());

    if trips.is_empty() {
        println!("No completed round-trips yet.");
    } else {
        let wins = trips.iter().filter(|t| t.realized_pnl > 0.0).count();
        let losses = trips.len() - wins;
        let total_fees: f64 = trips.iter().map(|t| t.fees).sum();
        let best = trips
            .iter()
            .map(|t| t.realized_pnl)
            .fold(f64::NEG_INFINITY, f64::max);
        let worst = trips
            .iter()
            .map(|t| t.realized_pnl)
            .fold(f64::INFINITY, f64::min);
        let avg_hold_mins = trips
            .iter()
            .map(|t| (t.exit_time - t.entry_time).num_seconds() as f64 / 60.0)
            .sum::<f64>()
            / trips.len() as f64;

        println!("Round-trips:         {}", trips.len());
        println!(
            "Wins / Losses:       {} / {} ({:.1}% win rate)",
            wins,
            losses,
            wins as f64 / trips.len() as f64 * 100.0
        );
        println!("Fees (assumed):      {:.6}", total_fees);
        println!("Best / Worst:        {:+.6} / {:+.6}", best, worst);
        println!("Avg hold:            {:.1} min", avg_hold_mins);

        if args.verbose {
            println!();
            for (i, t) in trips.iter().enumerate() {
                println!(
                    "#{:<3} {} → {}  qty={:.8}  {:.2} → {:.2}  fees={:.6}  pnl={:+.6}",
                    i + 1,
                    t.entry_time.format("%Y-%m-%d %H:%M"),
                    t.exit_time.format("%H:%M"),
                    t.qty,
                    t.entry_price,
                    t.exit_price,
                    t.fees,
                    t.realized_pnl
                );
            }
        }
    }

    if let Some(open) = ledger.open_buy() {
        println!(
            "\nOpen position:       {:.8} @ {:.2} since {}",
            open.qty, open.price, open.time
        );
    }

    println!("\nNet realized P&L:    {:+.6}", ledger.cumulative_net());
    Ok(())
}
