//! Copies a buffer through a rate limiter while a monitor reports progress.

use std::io::{self, Cursor};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use streamrate::{is_closed, LimitReader, Monitor, MonitorConfig, MonitorReader, MonitorWriter};

fn main() -> io::Result<()> {
    println!("=== Monitored Copy Example ===\n");

    // Example 1: Samples over a channel
    channel_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Samples through a callback
    callback_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Shared monitor
    shared_monitor_example();

    Ok(())
}

fn channel_example() -> io::Result<()> {
    println!("1. Throttled Copy, Channel Samples:");

    // 20 KB/s source, sampled every 250ms
    let source = LimitReader::new(Cursor::new(vec![0u8; 20_000]), 20_000);
    let (mut reader, samples) = MonitorReader::new(source, Duration::from_millis(250));

    let printer = thread::spawn(move || {
        for sample in samples {
            println!("   {}", sample);
        }
    });

    let copied = io::copy(&mut reader, &mut io::sink())?;
    println!("   Copied {} bytes", copied);

    // Closing stops the monitor; the printer sees the channel end.
    reader.close()?;
    let _ = printer.join();

    let err = io::Read::read(&mut reader, &mut [0u8; 8]).unwrap_err();
    println!("   Read after close is closed: {}", is_closed(&err));

    Ok(())
}

fn callback_example() -> io::Result<()> {
    println!("2. Callback Samples:");

    let peak = Arc::new(Mutex::new(0.0f64));
    let seen = peak.clone();

    let mut writer = MonitorWriter::with_callback(io::sink(), Duration::from_millis(100), move |s| {
        let mut peak = seen.lock().unwrap();
        if s.rate > *peak {
            *peak = s.rate;
        }
    });

    let mut source = LimitReader::new(Cursor::new(vec![1u8; 8_000]), 16_000);
    io::copy(&mut source, &mut writer)?;
    thread::sleep(Duration::from_millis(150));
    writer.close()?;

    println!("   Peak observed rate: {:.0} B/s", *peak.lock().unwrap());

    Ok(())
}

fn shared_monitor_example() {
    println!("3. Shared Monitor Across Threads:");

    let config = MonitorConfig::default()
        .with_period(Duration::from_millis(100))
        .with_capacity(2);
    let (monitor, samples) = Monitor::with_config(config);
    let monitor = Arc::new(monitor);

    let workers: Vec<_> = (0..4)
        .map(|id| {
            let monitor = monitor.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    monitor.add(100 * (id + 1));
                    thread::sleep(Duration::from_millis(10));
                }
            })
        })
        .collect();

    for worker in workers {
        let _ = worker.join();
    }

    let mut last = samples.recv().ok();
    while let Some(sample) = last {
        if sample.total >= 10_000 {
            break;
        }
        last = samples.recv().ok();
    }

    monitor.stop();
    if let Some(sample) = last {
        println!("   Final: {}", sample);
    }
}
