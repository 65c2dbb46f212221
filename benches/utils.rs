use rand::{Rng, SeedableRng, rngs::StdRng};
use scriptlate::{Params, Value};

/// `n` reproducible parameter sets for the profile template.
pub fn generate_random_params(n: usize) -> Vec<Params> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut all = Vec::with_capacity(n);

    for _ in 0..n {
        let name = random_string(&mut rng, 5, 10);
        let age = rng.random_range(18..80);
        let is_active = rng.random_bool(0.7);

        let items_count = rng.random_range(3..10);
        let mut items = Vec::with_capacity(items_count);
        for _ in 0..items_count {
            let item_name = random_string(&mut rng, 3, 8);
            let item_value = rng.random_range(10..1000);
            items.push(Value::map([
                ("name", Value::from(item_name)),
                ("value", Value::Int(item_value)),
                ("special", Value::Bool(rng.random_bool(0.3))),
            ]));
        }

        let mut params = Params::new();
        params
            .insert(
                "user",
                Value::map([
                    ("name", Value::from(name)),
                    ("age", Value::Int(age)),
                    ("active", Value::Bool(is_active)),
                ]),
            )
            .insert("items", Value::list(items))
            .insert("show_details", rng.random_bool(0.8))
            .insert("has_access", rng.random_bool(0.6));
        all.push(params);
    }

    all
}

/// A lowercase ASCII word of `min_len..=max_len` letters.
fn random_string(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    let len = rng.random_range(min_len..=max_len);
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

/// Reports the size of the running bench executable.
pub fn print_binary_size() {
    let Ok(path) = std::env::current_exe() else {
        return;
    };
    let Ok(bytes) = std::fs::metadata(&path).map(|meta| meta.len()) else {
        return;
    };
    println!(
        "{}: {bytes} bytes ({:.1} KiB)",
        path.display(),
        bytes as f64 / 1024.0
    );
}
