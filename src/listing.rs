// Student listing
// The `mhs` (mahasiswa) table and the labelled four-line rendering of a
// student record: Nama, Nim, Jurusan, Alamat

use crate::query::{QueryExecutor, QueryResult};
use crate::storage::Row;
use anyhow::{anyhow, Result};

pub const MHS_TABLE: &str = "mhs";

/// Loader script for the built-in `mhs` table
pub const MHS_SCRIPT: &str = "
    CREATE TABLE mhs (
        NIM VARCHAR(16) PRIMARY KEY,
        NAMA VARCHAR(60) NOT NULL,
        Jurusan VARCHAR(40),
        Alamat TEXT
    );
    INSERT INTO mhs VALUES
        ('A11.2023.0001', 'Ardina Jandrilia', 'Teknik Informatika', 'Semarang'),
        ('A11.2023.0002', 'Bima Saputra', 'Teknik Informatika', 'Demak'),
        ('A12.2023.0003', 'Citra Lestari', 'Sistem Informasi', 'Kudus'),
        ('A12.2023.0004', 'Dewi Anggraini', 'Sistem Informasi', 'Semarang'),
        ('A14.2023.0005', 'Eko Prasetyo', 'Desain Komunikasi Visual', NULL)";

/// Labels and the columns they read, in print order
const FIELDS: [(&str, &str); 4] = [
    ("Nama", "NAMA"),
    ("Nim", "NIM"),
    ("Jurusan", "Jurusan"),
    ("Alamat", "Alamat"),
];

/// Create and fill the `mhs` table
pub fn load_mhs(executor: &mut QueryExecutor) -> Result<()> {
    executor.run_script(MHS_SCRIPT)
}

/// Render one student as four `Label : value` lines
pub fn format_student(column_names: &[String], row: &Row) -> Result<String> {
    let mut lines = Vec::with_capacity(FIELDS.len());
    for (label, column) in FIELDS {
        let index = column_names
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| anyhow!("Result has no '{}' column", column))?;
        lines.push(format!("{} : {}", label, row.values[index]));
    }
    Ok(lines.join("\n"))
}

/// Render every student of a result, one block per row
pub fn format_students(result: &QueryResult) -> Result<String> {
    let blocks = result
        .rows()
        .iter()
        .map(|row| format_student(result.column_names(), row))
        .collect::<Result<Vec<_>>>()?;
    Ok(blocks.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::QuerySpecBuilder;

    #[test]
    fn test_listing_of_all_students() {
        let mut db = QueryExecutor::new();
        load_mhs(&mut db).unwrap();

        let spec = QuerySpecBuilder::new().resolve().unwrap();
        let result = db.find(MHS_TABLE, &spec).unwrap();
        assert_eq!(result.rows().len(), 5);

        let text = format_students(&result).unwrap();
        assert!(text.starts_with(
            "Nama : Ardina Jandrilia\nNim : A11.2023.0001\nJurusan : Teknik Informatika\nAlamat : Semarang"
        ));
        assert!(text.ends_with("Alamat : NULL"));
        assert_eq!(text.lines().count(), 20);
    }

    #[test]
    fn test_listing_needs_all_four_columns() {
        let mut db = QueryExecutor::new();
        load_mhs(&mut db).unwrap();

        let spec = QuerySpecBuilder::new().resolve().unwrap();
        let result = db
            .select(Default::default(), MHS_TABLE, &["NAMA", "NIM"], &spec)
            .unwrap();
        assert!(format_students(&result).is_err());
    }

    #[test]
    fn test_filtered_listing() {
        let mut db = QueryExecutor::new();
        load_mhs(&mut db).unwrap();

        let spec = QuerySpecBuilder::new()
            .r#where("Alamat = :kota")
            .bind("kota", "Semarang")
            .order_by(["NAMA DESC"])
            .resolve()
            .unwrap();
        let result = db.find(MHS_TABLE, &spec).unwrap();
        let text = format_students(&result).unwrap();
        assert!(text.starts_with("Nama : Dewi Anggraini"));
        assert_eq!(text.lines().count(), 8);
    }
}
