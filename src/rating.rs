use rand::Rng;

use crate::fighter::{Fighter, Record};

const WIN_WEIGHT: u32 = 5;
const KO_WEIGHT: u32 = 3;

/// Fights + 5 per win + 3 per KO, saturating at `u32::MAX`.
pub fn rating(record: &Record) -> u32 {
    record
        .fights()
        .saturating_add(record.wins.saturating_mul(WIN_WEIGHT))
        .saturating_add(record.kos.saturating_mul(KO_WEIGHT))
}

pub fn win_probability(score_a: u32, score_b: u32) -> f64 {
    let total = u64::from(score_a) + u64::from(score_b);
    if total == 0 {
        return 0.5;
    }
    f64::from(score_a) / total as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    Blue,
    Red,
}

#[derive(Debug, Clone)]
pub struct BoutResult {
    pub winner: Corner,
    pub rating_blue: u32,
    pub rating_red: u32,
    pub p_blue: f64,
    pub roll: f64,
    pub log: Vec<String>,
}

impl BoutResult {
    pub fn winner_of<'a>(&self, blue: &'a Fighter, red: &'a Fighter) -> &'a Fighter {
        match self.winner {
            Corner::Blue => blue,
            Corner::Red => red,
        }
    }
}

pub fn simulate_bout<R: Rng>(blue: &Fighter, red: &Fighter, rng: &mut R) -> BoutResult {
    let rating_blue = rating(&blue.record);
    let rating_red = rating(&red.record);
    let p_blue = win_probability(rating_blue, rating_red);
    // Uniform in [0, 1); blue takes the bout when the roll lands under p_blue.
    let roll: f64 = rng.r#gen();
    let winner = if roll < p_blue { Corner::Blue } else { Corner::Red };
    let winner_name = match winner {
        Corner::Blue => &blue.name,
        Corner::Red => &red.name,
    };

    let log = vec![
        "Match started!".to_string(),
        format!("{} (Rating: {rating_blue}) comes out aggressive.", blue.name),
        format!("{} (Rating: {rating_red}) counters.", red.name),
        "A hard exchange!".to_string(),
        format!("WINNER: {}!", winner_name.to_uppercase()),
    ];

    BoutResult {
        winner,
        rating_blue,
        rating_red,
        p_blue,
        roll,
        log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_formula() {
        let record = Record {
            wins: 10,
            losses: 2,
            draws: 1,
            kos: 5,
        };
        assert_eq!(rating(&record), 78);
        assert_eq!(rating(&Record::default()), 0);
    }

    #[test]
    fn probability_is_share_of_total() {
        assert_eq!(win_probability(0, 0), 0.5);
        assert!((win_probability(30, 10) - 0.75).abs() < 1e-12);
        assert_eq!(win_probability(0, 10), 0.0);
        assert_eq!(win_probability(10, 0), 1.0);
    }

    #[test]
    fn huge_records_saturate() {
        let record = Record {
            wins: 900_000_000,
            losses: 2,
            draws: 0,
            kos: u32::MAX,
        };
        assert_eq!(record.fights(), 900_000_002);
        assert_eq!(rating(&record), u32::MAX);
        assert_eq!(win_probability(u32::MAX, u32::MAX), 0.5);
    }
}
