#![no_main]

use fc_chain::FilterChain;
use fc_eval::{evaluate, evaluate_mask};
use fc_io::read_chain_json;
use fc_types::Row;
use libfuzzer_sys::fuzz_target;

// Input: a JSON chain, a NUL byte, then a JSON array of rows.
fuzz_target!(|data: &[u8]| {
    let Some(split) = data.iter().position(|b| *b == 0) else {
        return;
    };
    let (Ok(chain_text), Ok(rows_text)) = (
        std::str::from_utf8(&data[..split]),
        std::str::from_utf8(&data[split + 1..]),
    ) else {
        return;
    };
    let Ok(chain) = read_chain_json(chain_text) else {
        return;
    };
    let Ok(rows) = serde_json::from_str::<Vec<Row>>(rows_text) else {
        return;
    };

    let kept = evaluate(&rows, &chain);
    let mask = evaluate_mask(&rows, &chain.normalized());
    assert_eq!(kept.len(), mask.iter().filter(|keep| **keep).count());
    assert_eq!(evaluate(&rows, &FilterChain::new()).len(), rows.len());
});
