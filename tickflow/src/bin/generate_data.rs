//! Synthetic trade flatfile generator: `generate_data [rows] [path]`.
//!
//! Seeded, so the same invocation reproduces the same file. Prices follow a
//! clamped per-symbol random walk; timestamps advance 5-50 microseconds per
//! row from a fixed market open.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_ROWS: usize = 1_000_000;
const DEFAULT_PATH: &str = "trades.csv";
const SEED: u64 = 42;

// Index heavyweights repeat so they trade more often.
const SYMBOLS: &[&str] = &[
    "RELIANCE",
    "RELIANCE",
    "RELIANCE",
    "TCS",
    "TCS",
    "TCS",
    "INFY",
    "INFY",
    "HDFC",
    "HDFC",
    "WIPRO",
    "ICICIBANK",
    "BAJFINANCE",
    "HCLTECH",
    "AXISBANK",
    "SBIN",
];

fn main() {
    let mut args = std::env::args().skip(1);
    let rows = match args.next() {
        Some(arg) => match arg.parse() {
            Ok(rows) => rows,
            Err(_) => {
                eprintln!("usage: generate_data [rows] [path]");
                process::exit(2);
            }
        },
        None => DEFAULT_ROWS,
    };
    let path = args.next().unwrap_or_else(|| DEFAULT_PATH.to_string());

    if let Err(err) = generate(rows, &path) {
        eprintln!("generate_data failed: {err}");
        process::exit(1);
    }
    println!("wrote {rows} rows to {path}");
}

fn generate(rows: usize, path: &str) -> std::io::Result<()> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut prices: HashMap<&str, f64> = [
        ("RELIANCE", 2456.75),
        ("TCS", 3567.50),
        ("INFY", 1423.25),
        ("HDFC", 1678.90),
        ("WIPRO", 432.60),
        ("ICICIBANK", 987.45),
        ("BAJFINANCE", 6823.10),
        ("HCLTECH", 1234.55),
        ("AXISBANK", 987.30),
        ("SBIN", 601.75),
    ]
    .into_iter()
    .collect();

    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "trade_id,order_id,timestamp,symbol,price,volume,side,type,is_pro")?;

    // Market open in epoch nanoseconds.
    let mut timestamp: i64 = 1_698_208_500_000_000_000;
    for i in 0..rows {
        let symbol = SYMBOLS[rng.gen_range(0..SYMBOLS.len())];
        let price = prices.entry(symbol).or_insert(100.0);
        *price = (*price + rng.gen_range(-0.5..0.5)).clamp(50.0, 99_999.0);

        let volume: u32 = rng.gen_range(10..=5_000);
        let side = if rng.gen_bool(0.5) { 'B' } else { 'S' };
        // Roughly 30% market, 60% limit, 10% IOC.
        let kind = match rng.gen_range(0..10) {
            0..=2 => 'M',
            3..=8 => 'L',
            _ => 'I',
        };
        let is_pro = rng.gen_bool(0.2);
        timestamp += rng.gen_range(5_000i64..=50_000);

        writeln!(
            out,
            "{},{},{},{},{:.2},{},{},{},{}",
            1_000_000 + i,
            2_000_000 + i,
            timestamp,
            symbol,
            *price,
            volume,
            side,
            kind,
            u8::from(is_pro)
        )?;
    }
    out.flush()?;
    Ok(())
}
