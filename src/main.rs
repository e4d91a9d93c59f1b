use std::sync::Arc;

use rill::buffer::BufferPoolManager;
use rill::catalog::CatalogManager;
use rill::index::ComparisonOp;
use rill::record::{DataType, Field, Row, Schema};
use rill::storage::disk::DiskManager;

fn main() -> rill::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let db_path = "demo.db";
    let disk = Arc::new(DiskManager::new(db_path)?);
    let bpm = Arc::new(BufferPoolManager::new(64, 2, disk));
    let mut catalog = CatalogManager::new(Arc::clone(&bpm), true)?;

    println!("Rill - a disk-backed relational storage engine");
    println!("==============================================\n");

    let schema = Schema::builder()
        .unique_column("id", DataType::Int32)
        .column("name", DataType::Char(16))
        .nullable_column("balance", DataType::Float32)
        .build();
    catalog.create_table("accounts", schema)?;
    println!("created table `accounts`");

    let people = [
        (1, "ada", 120.5f32),
        (2, "brian", 37.0),
        (3, "claude", 99.9),
    ];
    let mut rids = Vec::new();
    {
        let table = catalog.get_table("accounts")?;
        for (id, name, balance) in people {
            let mut row = Row::new(vec![
                Field::from(id),
                Field::from(name),
                Field::from(balance),
            ]);
            let rid = table.heap().insert_tuple(&mut row)?;
            rids.push(rid);
            println!("inserted ({id}, {name}, {balance}) at {rid}");
        }
    }

    catalog.create_index("accounts", "accounts_by_name", &["name"])?;
    {
        let rows: Vec<Row> = {
            let table = catalog.get_table("accounts")?;
            table.heap().iter()?.collect::<rill::Result<_>>()?
        };
        let index = catalog.get_index_mut("accounts", "accounts_by_name")?;
        for row in &rows {
            index.index_mut().insert_entry(row, row.row_id())?;
        }
    }
    println!("\ncreated index `accounts_by_name` and indexed existing rows");

    let index = catalog.get_index("accounts", "accounts_by_name")?;
    let probe = Row::new(vec![Field::from("brian")]);
    for rid in index.index().scan(&probe, ComparisonOp::Equal)? {
        let table = catalog.get_table("accounts")?;
        let row = table.heap().get_tuple(rid)?;
        println!(
            "index lookup name='brian' -> {} {}",
            row.field(0).unwrap(),
            row.field(2).unwrap()
        );
    }

    println!("\nfull scan:");
    let table = catalog.get_table("accounts")?;
    for row in table.heap().iter()? {
        let row = row?;
        println!(
            "  {} | {} | {}",
            row.field(0).unwrap(),
            row.field(1).unwrap(),
            row.field(2).unwrap()
        );
    }

    catalog.flush()?;
    bpm.flush_all_pages()?;
    println!("\nflushed; database at `{db_path}`");

    std::fs::remove_file(db_path).ok();
    Ok(())
}
