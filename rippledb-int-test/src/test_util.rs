use rand::Rng;
use rippledb::collection::Document;
use rippledb::common::Value;
use rippledb::database::Database;
use rippledb::doc;
use rippledb::errors::RippleResult;
use std::backtrace::Backtrace;
use std::time::{Duration, Instant};
use std::thread;

/// Runs a test with retry logic and error handling.
/// Tests run on the current thread to avoid thread exhaustion when running many tests in parallel.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> RippleResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> RippleResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> RippleResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => match after(ctx.clone()) {
                        Ok(_) => Ok(()),
                        Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                    },
                    Err(e) => {
                        let _ = after(ctx.clone());
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e.clone());
                last_backtrace = Some(bt);
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Error: {}", e);
                    eprintln!("Retrying in {}ms...\n", 100 * attempt);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    format!("Unknown panic: {:?}", panic_err.type_id())
                };

                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = Some(Backtrace::capture().to_string());

                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Panicked (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("{}", last_error.as_deref().unwrap_or_default());
                    eprintln!("Retrying in {}ms...\n", 100 * attempt);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    name: String,
    db: Database,
}

impl TestContext {
    pub fn new(name: String, db: Database) -> Self {
        Self { name, db }
    }

    /// A collection name unique to this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db(&self) -> Database {
        self.db.clone()
    }
}

pub fn random_name() -> String {
    format!("test_{}", uuid::Uuid::new_v4().simple())
}

pub fn create_test_context() -> RippleResult<TestContext> {
    let db = Database::builder().open()?;
    Ok(TestContext::new(random_name(), db))
}

/// A database whose collections emit change events immediately and queue
/// batches larger than `threshold` without a background driver.
pub fn create_manual_queue_context(threshold: usize) -> RippleResult<TestContext> {
    let db = Database::builder()
        .defer_threshold(threshold)
        .change_debounce(None)
        .auto_drain(false)
        .open()?;
    Ok(TestContext::new(random_name(), db))
}

pub fn cleanup(ctx: TestContext) -> RippleResult<()> {
    ctx.db().close()
}

pub fn create_test_docs() -> Vec<Document> {
    let doc1 = doc! {
        _id: "1",
        first_name: "fn1",
        last_name: "ln1",
        age: 15,
        tags: ["one", "two", "three"],
        address: { city: "Paris", zip: 75001 },
        body: "a quick brown fox jump over the lazy dog",
    };

    let doc2 = doc! {
        _id: "2",
        first_name: "fn2",
        last_name: "ln2",
        age: 22,
        tags: ["two"],
        address: { city: "London", zip: 10001 },
        body: "quick hello world from nitrogen",
    };

    let doc3 = doc! {
        _id: "3",
        first_name: "fn3",
        last_name: "ln2",
        age: 40,
        tags: [],
        address: { city: "Paris", zip: 75002 },
        body: "Lorem ipsum dolor sit amet",
    };

    vec![doc1, doc2, doc3]
}

/// Documents with random ages and cities, keyed `0..count`.
pub fn create_random_docs(count: usize) -> Vec<Document> {
    let cities = ["Paris", "London", "Tokyo", "Lima"];
    let mut rng = rand::rng();
    (0..count)
        .map(|i| {
            let mut document = doc! {
                age: (rng.random_range(0..60)),
                city: (cities[rng.random_range(0..cities.len())]),
            };
            document.put("_id", i as i64);
            if rng.random_bool(0.2) {
                document.put("nick", Value::Null);
            }
            document
        })
        .collect()
}

/// Primary keys of `documents`, sorted, for order-insensitive comparison.
pub fn sorted_keys(documents: &[Document]) -> Vec<Value> {
    let mut keys: Vec<Value> = documents.iter().filter_map(|d| d.get("_id").cloned()).collect();
    keys.sort();
    keys
}

pub fn ids(documents: &[Document]) -> Vec<String> {
    documents
        .iter()
        .filter_map(|d| d.get("_id").and_then(|v| v.as_string()).map(String::from))
        .collect()
}
