// Example: Row locking between two sessions
// Run with: cargo run --example locking_demo

use selectspec::listing;
use selectspec::{LockContention, QueryExecutor, QuerySpecBuilder, SessionId};

fn main() -> anyhow::Result<()> {
    println!("=== selectspec Locking Example ===\n");

    let mut db = QueryExecutor::new();
    listing::load_mhs(&mut db)?;

    let admin = SessionId(1);
    let reporter = SessionId(2);

    // The admin locks every Informatics student for update
    let mut builder = QuerySpecBuilder::new();
    builder
        .r#where("Jurusan = 'Teknik Informatika'")
        .lock_exclusive();
    let spec = builder.resolve()?;
    println!("{} ({})", admin, spec.to_sql(listing::MHS_TABLE));
    let result = db.select(admin, listing::MHS_TABLE, &["NIM", "NAMA"], &spec)?;
    println!("{}\n", result.format());

    // The reporter tries each contention option on a shared lock
    let mut report = QuerySpecBuilder::new();
    report.order_by(["NIM"]);
    for contention in [
        LockContention::Default,
        LockContention::NoWait,
        LockContention::SkipLocked,
    ] {
        report.lock_shared_with(contention);
        let spec = report.resolve()?;
        println!("{} ({})", reporter, spec.to_sql(listing::MHS_TABLE));
        match db.select(reporter, listing::MHS_TABLE, &["NIM", "NAMA"], &spec) {
            Ok(result) => println!("{}\n", result.format()),
            Err(e) => println!("Error: {}\n", e),
        }
    }

    // Once the admin is done, everything is readable again
    println!("{} released {} lock(s)\n", admin, db.release(admin));
    let spec = report.lock_shared_with(LockContention::NoWait).resolve()?;
    let result = db.select(reporter, listing::MHS_TABLE, &["NIM", "NAMA"], &spec)?;
    println!("{}\n", result.format());

    println!("=== Example Complete ===");
    Ok(())
}
