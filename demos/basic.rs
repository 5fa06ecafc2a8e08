//! Basic usage example for the streamrate crate.

use std::io::{self, Cursor, Read, Write};
use std::time::{Duration, Instant};
use streamrate::{LimitReader, LimitWriter, LimiterBuilder};

fn main() -> io::Result<()> {
    println!("=== Basic Bandwidth Limiting Example ===\n");

    // Example 1: Throttled write
    limited_write_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Short reads
    limited_read_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Builder and validation
    builder_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 4: Metrics
    metrics_example()?;

    Ok(())
}

fn limited_write_example() -> io::Result<()> {
    println!("1. Rate-Limited Writer:");

    // 2 KB/s, granted in 100ms quanta of 200 bytes
    let mut writer = LimitWriter::new(Vec::new(), 2000);
    let payload = vec![b'x'; 1000];

    println!("   Writing {} bytes at 2000 B/s...", payload.len());
    let start = Instant::now();
    writer.write_all(&payload)?;

    println!("   Done in {:?}", start.elapsed());
    println!("   Quanta used: {}", writer.metrics().quanta);

    Ok(())
}

fn limited_read_example() -> io::Result<()> {
    println!("2. Rate-Limited Reader:");

    let source = Cursor::new(vec![0u8; 1500]);
    let mut reader = LimitReader::with_quantum(source, 5000, Duration::from_millis(50));
    let mut buf = [0u8; 1024];

    // Each read returns at most one quantum's budget (250 bytes here)
    let start = Instant::now();
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        println!("   {:?} read {} bytes", start.elapsed(), n);
    }

    Ok(())
}

fn builder_example() -> io::Result<()> {
    println!("3. Builder:");

    let writer = LimiterBuilder::new()
        .bytes_per_second(64 * 1024)
        .quantum(Duration::from_millis(20))
        .writer(io::sink());

    println!("   Config: {:?}", writer.config());
    println!("   Budget: {} bytes per quantum", writer.metrics().bytes_per_quantum());

    // A configuration whose quantum budget cannot be represented is rejected
    let result = LimiterBuilder::new()
        .bytes_per_second(u64::MAX)
        .quantum(Duration::from_secs(u64::MAX))
        .try_writer(io::sink());
    match result {
        Ok(_) => println!("   ✅ Accepted"),
        Err(e) => println!("   ❌ Rejected: {}", e),
    }

    Ok(())
}

fn metrics_example() -> io::Result<()> {
    println!("4. Limiter Metrics:");

    let mut writer = LimitWriter::with_quantum(io::sink(), 10_000, Duration::from_millis(10));
    for _ in 0..10 {
        writer.write_all(&[0u8; 150])?;
    }

    let metrics = writer.metrics();
    println!("   {}", metrics);
    println!("{}", metrics.summary());
    println!("   Time spent waiting: {:.1}%", metrics.wait_ratio() * 100.0);

    Ok(())
}
