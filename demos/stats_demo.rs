use clap::Parser;
use clap::ValueEnum;
use dense_hash::AnkerlIndex;
use dense_hash::ChainedIndex;
use dense_hash::HashMap;
use dense_hash::hasher::IdentityState;
use dense_hash::hasher::RapidState;
use dense_hash::search::HashIndex;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Index {
    Ankerl,
    Chained,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mixer {
    Rapid,
    Identity,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'n', long = "count", default_value_t = 100_000)]
    count: usize,

    #[arg(short = 'i', long = "index", value_enum, default_value_t = Index::Ankerl)]
    index: Index,

    #[arg(short = 'm', long = "mixer", value_enum, default_value_t = Mixer::Rapid)]
    mixer: Mixer,

    /// Remove this share of the keys again after filling.
    #[arg(short = 'r', long = "remove_ratio", default_value_t = 0.0)]
    remove_ratio: f64,

    /// Insert 0, 1, 2, ... instead of random keys.
    #[arg(long)]
    sequential: bool,
}

fn run<I: HashIndex, S: core::hash::BuildHasher + Default>(args: &Args) {
    let mut rng = SmallRng::from_os_rng();
    let keys: Vec<u64> = if args.sequential {
        (0..args.count as u64).collect()
    } else {
        (0..args.count).map(|_| rng.random()).collect()
    };

    let mut map: HashMap<u64, u64, I, S> = HashMap::default();
    for &key in &keys {
        map.add_or_replace(key, key);
    }
    println!("Inserted {} keys, capacity {}", map.len(), map.capacity());

    let removals = (keys.len() as f64 * args.remove_ratio.clamp(0.0, 1.0)) as usize;
    for key in &keys[..removals] {
        map.remove(key);
    }
    if removals > 0 {
        println!("Removed {removals} keys, {} left", map.len());
    }

    map.index_stats().print();
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    println!(
        "Filling a map with {} keys ({:?} index, {:?} mixer)",
        args.count, args.index, args.mixer
    );

    match (args.index, args.mixer) {
        (Index::Ankerl, Mixer::Rapid) => run::<AnkerlIndex, RapidState>(&args),
        (Index::Ankerl, Mixer::Identity) => run::<AnkerlIndex, IdentityState>(&args),
        (Index::Chained, Mixer::Rapid) => run::<ChainedIndex, RapidState>(&args),
        (Index::Chained, Mixer::Identity) => run::<ChainedIndex, IdentityState>(&args),
    }
}
