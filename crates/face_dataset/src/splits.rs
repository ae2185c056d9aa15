use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Split `items` into (train, validation), holding out `validation_percent`% for validation.
///
/// Items are shuffled with `seed` first so the held-out set is not just the CSV tail.
pub fn split_validation<T>(mut items: Vec<T>, validation_percent: u32, seed: u64) -> (Vec<T>, Vec<T>) {
    let pct = validation_percent.min(100) as usize;
    if pct == 0 || items.is_empty() {
        return (items, Vec::new());
    }
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    let val_len = items.len() * pct / 100;
    let train = items.split_off(val_len);
    (train, items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_out_floor_of_percentage() {
        let (train, val) = split_validation((0..25).collect::<Vec<_>>(), 10, 7);
        assert_eq!(val.len(), 2);
        assert_eq!(train.len(), 23);
        let mut all: Vec<_> = train.iter().chain(val.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn zero_percent_keeps_order() {
        let (train, val) = split_validation(vec![3, 1, 2], 0, 1);
        assert_eq!(train, vec![3, 1, 2]);
        assert!(val.is_empty());
    }

    #[test]
    fn same_seed_same_split() {
        let a = split_validation((0..50).collect::<Vec<_>>(), 20, 99);
        let b = split_validation((0..50).collect::<Vec<_>>(), 20, 99);
        assert_eq!(a, b);
    }
}
