//! Compares indexed and full-scan execution for a handful of query shapes.
//! Prints the `dev6!` bench records emitted by each run as NDJSON.

use bson::doc;
use nexusmatch::collection::Collection;
use nexusmatch::config::QueryConfig;
use nexusmatch::query::{FindOptions, IndexDirection, parse_query_json};
use nexusmatch::utils::devlog;

const DOCS: i64 = 50_000;

const QUERIES: &[&str] = &[
    r#"{"i":{"$not":{"$ne":4242}}}"#,
    r#"{"i":{"$gte":1000,"$lt":1100}}"#,
    r#"{"i":{"$not":{"$gt":1000}}}"#,
    r#"{"s":{"$not":{"$regularExpression":{"pattern":"^k1","options":""}}}}"#,
    r#"{"tags":{"$not":{"$size":2}}}"#,
];

fn populate(col: &Collection) {
    for n in 0..DOCS {
        col.insert(doc! {
            "i": n,
            "s": format!("k{}", n % 97),
            "tags": (0..(n % 4)).map(|t| format!("t{t}")).collect::<Vec<_>>(),
        });
    }
}

fn main() {
    let cfg = QueryConfig::default();
    let plain = Collection::new("plain", cfg.clone());
    let indexed = Collection::new("indexed", cfg.clone());
    populate(&plain);
    populate(&indexed);
    indexed.create_index("i", IndexDirection::Asc);
    indexed.create_index("s", IndexDirection::Asc);

    let _sink = devlog::enable_thread_sink();
    for q in QUERIES {
        let query = match parse_query_json(q, &cfg) {
            Ok(query) => query,
            Err(e) => {
                eprintln!("skipping {q}: {e}");
                continue;
            }
        };
        for col in [&plain, &indexed] {
            let _ = col.count(&query);
            let _ = col.find(&query, &FindOptions::default()).itcount();
        }
        println!("# {q} -> {}", indexed.explain(&query).cursor);
        for line in devlog::drain() {
            println!("{line}");
        }
    }
}
