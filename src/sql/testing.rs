//! Tables shared by the unit tests

use crate::{
    error::Result,
    sql::{
        database::Database,
        types::{BitfieldDef, LINK_TYPE, pack_string},
    },
    storage::MemoryTable,
};

/// Routes log output through the test harness, filtered by `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const MISSING: f64 = -2147483647.0;

pub const INTEGER_DATA: [f64; 9] = [9999.0, 8888.0, 7777.0, 6666.0, 5555.0, 4444.0, 3333.0, 2222.0, 1111.0];

pub const REAL_DATA: [f64; 9] = [1.1, 2.2, 3.3, 4.4, 5.5, 6.6, 7.7, 8.8, 9.9];

pub const REAL_DATA2: [f64; 9] = [11.111, 22.222, 33.333, 44.444, 55.555, 66.666, 77.777, 88.888, 99.999];

/// `t(icol integer, rcol real)` holding (1, 10), (2, 20), (3, 20)
pub fn worked_example() -> Result<Database> {
    let mut db = Database::new("db");
    let mut source = MemoryTable::new(vec![1, 1]);
    for (i, r) in [(1.0, 10.0), (2.0, 20.0), (3.0, 20.0)] {
        source.push_row(vec![i, r])?;
    }
    let mut table = db.new_table("t", "mem:t", Box::new(source));
    table.add_column("icol", 0, db.types().lookup("integer")?, false, 0.0, None)?;
    table.add_column("rcol", 1, db.types().lookup("real")?, false, 0.0, None)?;
    db.add_table(table);
    Ok(db)
}

/// `a(aval, b @LINK)` with three rows addressing the windows [0,2), [2,3)
/// and [3,5) of `b(bval)`, which holds 10, 20, 30, 40, 50
pub fn link_example() -> Result<Database> {
    let mut db = Database::new("db");

    let mut source = MemoryTable::new(vec![1, 1, 1]);
    for row in [[1.0, 0.0, 2.0], [2.0, 2.0, 1.0], [3.0, 3.0, 2.0]] {
        source.push_row(row.to_vec())?;
    }
    let mut a = db.new_table("a", "mem:a", Box::new(source));
    a.add_column("aval", 0, db.types().lookup("integer")?, false, 0.0, None)?;
    a.add_column("b", 1, db.types().lookup(LINK_TYPE)?, false, 0.0, None)?;
    db.add_table(a);

    let mut source = MemoryTable::new(vec![1]);
    for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
        source.push_row(vec![v])?;
    }
    let mut b = db.new_table("b", "mem:b", Box::new(source));
    b.add_column("bval", 0, db.types().lookup("integer")?, false, 0.0, None)?;
    db.add_table(b);

    db.link("a", "b")?;
    Ok(db)
}

/// `obs(statid string, status bitfield[active:1;level:3], obsvalue real,
/// ival integer, rval real, rval2 real)`; nine rows from the data arrays,
/// every third `obsvalue` missing
pub fn observations() -> Result<Database> {
    let mut db = Database::new("db");
    let mut source = MemoryTable::new(vec![1, 1, 1, 1, 1, 1]);
    let stations = ["10001", "10002", "10003"];
    for i in 0..9 {
        let mut row = pack_string(stations[i % 3], 1);
        let active = (i % 2) as f64;
        let level = (i % 8) as f64;
        row.push(active + level * 2.0);
        row.push(if i % 3 == 2 { MISSING } else { i as f64 * 0.5 });
        row.push(INTEGER_DATA[i]);
        row.push(REAL_DATA[i]);
        row.push(REAL_DATA2[i]);
        source.push_row(row)?;
    }

    let types = db.types().clone();
    let mut table = db.new_table("obs", "mem:obs", Box::new(source));
    table.add_column("statid", 0, types.lookup("string")?, false, 0.0, None)?;
    let def = BitfieldDef::new(vec!["active".into(), "level".into()], vec![1, 3])?;
    let status = types.make_bitfield("status", def.clone(), None)?;
    table.add_column("status", 1, status, false, 0.0, Some(def))?;
    table.add_column("obsvalue", 2, types.lookup("real")?, true, MISSING, None)?;
    table.add_column("ival", 3, types.lookup("integer")?, false, 0.0, None)?;
    table.add_column("rval", 4, types.lookup("real")?, false, 0.0, None)?;
    table.add_column("rval2", 5, types.lookup("real")?, false, 0.0, None)?;
    db.add_table(table);
    Ok(db)
}
