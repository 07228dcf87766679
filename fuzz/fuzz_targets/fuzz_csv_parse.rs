#![no_main]

use fc_io::{read_csv_str, write_csv_string};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(table) = read_csv_str(text) {
        let _ = write_csv_string(&table.rows, &table.columns, &Default::default());
    }
});
