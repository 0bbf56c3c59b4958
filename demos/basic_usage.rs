// Example: Basic query spec usage
// Run with: cargo run --example basic_usage

use selectspec::listing;
use selectspec::{QueryExecutor, QuerySpecBuilder, SessionId};

fn main() -> anyhow::Result<()> {
    println!("=== selectspec Basic Usage Example ===\n");

    // Create a new database executor and fill the students table
    let mut db = QueryExecutor::new();
    listing::load_mhs(&mut db)?;

    // 1. Every student, printed the classic way
    println!("1. Listing every student...");
    let spec = QuerySpecBuilder::new().resolve()?;
    let result = db.find(listing::MHS_TABLE, &spec)?;
    println!("{}\n", listing::format_students(&result)?);

    // 2. Refine one builder step by step; each call replaces the previous one
    println!("2. Students from Semarang, newest NIM first...");
    let mut builder = QuerySpecBuilder::new();
    builder
        .r#where("Alamat = 'Demak'")
        .r#where("Alamat = :kota")
        .bind("kota", "Semarang")
        .order_by(["NIM DESC"]);
    let spec = builder.resolve()?;
    println!("{}", spec.to_sql(listing::MHS_TABLE));
    println!("{}\n", db.find(listing::MHS_TABLE, &spec)?.format());

    // 3. Group by major
    println!("3. Students per major...");
    builder
        .r#where("")
        .clear_bindings()
        .group_by(["Jurusan"])
        .having("count(*) >= 1")
        .order_by(["total DESC", "Jurusan"]);
    let spec = builder.resolve()?;
    let result = db.select(
        SessionId(1),
        listing::MHS_TABLE,
        &["Jurusan", "count(*) AS total"],
        &spec,
    )?;
    println!("{}\n", result.format());

    // 4. Page through the table two rows at a time
    println!("4. Second page of two...");
    let spec = QuerySpecBuilder::new()
        .order_by(["NIM"])
        .limit(2)?
        .offset(2)?
        .resolve()?;
    let result = db.select(SessionId(1), listing::MHS_TABLE, &["NIM", "NAMA"], &spec)?;
    println!("{}\n", result.format());

    // 5. Invalid specs are reported, not executed
    println!("5. HAVING without GROUP BY...");
    match QuerySpecBuilder::new().having("count(*) > 1").resolve() {
        Ok(_) => println!("unexpectedly resolved"),
        Err(e) => println!("Error: {}\n", e),
    }

    println!("=== Example Complete ===");
    Ok(())
}
