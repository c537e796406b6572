//! Caractéristiques élémentaires d'un ensemble de numéros triés par ordre croissant.

use superlotto_db::models::{ball_zone, Pool, BIG_BALL_MIN};

pub const PRIMES: [u8; 11] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31];

/// Plus grand numéro considéré comme « petit ».
pub const SMALL_BALL_MAX: u8 = 12;

pub fn sum(numbers: &[u8]) -> u16 {
    numbers.iter().map(|&n| n as u16).sum()
}

pub fn odd_count(numbers: &[u8]) -> u8 {
    numbers.iter().filter(|&&n| n % 2 == 1).count() as u8
}

pub fn big_count(numbers: &[u8]) -> u8 {
    numbers.iter().filter(|&&n| n >= BIG_BALL_MIN).count() as u8
}

pub fn small_count(numbers: &[u8]) -> u8 {
    numbers.iter().filter(|&&n| n <= SMALL_BALL_MAX).count() as u8
}

pub fn zone_counts(numbers: &[u8]) -> [u8; 3] {
    let mut zones = [0u8; 3];
    for &n in numbers {
        zones[ball_zone(n)] += 1;
    }
    zones
}

pub fn span(numbers: &[u8]) -> u8 {
    match (numbers.first(), numbers.last()) {
        (Some(&lo), Some(&hi)) => hi - lo,
        _ => 0,
    }
}

/// Nombre de paires adjacentes (n, n+1).
pub fn consecutive_pairs(numbers: &[u8]) -> u8 {
    numbers.windows(2).filter(|w| w[1] == w[0] + 1).count() as u8
}

/// Longueur de la plus longue suite d'entiers consécutifs.
pub fn longest_run(numbers: &[u8]) -> usize {
    if numbers.is_empty() {
        return 0;
    }
    let mut best = 1;
    let mut current = 1;
    for w in numbers.windows(2) {
        if w[1] == w[0] + 1 {
            current += 1;
            best = best.max(current);
        } else {
            current = 1;
        }
    }
    best
}

/// Valeur AC : nombre d'écarts distincts moins (n - 1).
pub fn ac_value(numbers: &[u8]) -> u8 {
    let mut seen = 0u64;
    for i in 0..numbers.len() {
        for j in (i + 1)..numbers.len() {
            let d = numbers[j].abs_diff(numbers[i]);
            seen |= 1u64 << d;
        }
    }
    let distinct = seen.count_ones() as usize;
    distinct.saturating_sub(numbers.len().saturating_sub(1)) as u8
}

pub fn prime_count(numbers: &[u8]) -> u8 {
    numbers.iter().filter(|n| PRIMES.contains(n)).count() as u8
}

/// Nombre de chiffres des unités distincts.
pub fn tail_diversity(numbers: &[u8]) -> u8 {
    let mut tails = 0u16;
    for &n in numbers {
        tails |= 1 << (n % 10);
    }
    tails.count_ones() as u8
}

/// Répartition des restes modulo 3.
pub fn modulus_counts(numbers: &[u8]) -> [u8; 3] {
    let mut counts = [0u8; 3];
    for &n in numbers {
        counts[(n % 3) as usize] += 1;
    }
    counts
}

pub fn low_half_count(numbers: &[u8], pool: Pool) -> u8 {
    let max = pool.low_half_max();
    numbers.iter().filter(|&&n| n <= max).count() as u8
}

/// Nombre de numéros de `numbers` à ±1 d'un numéro de `reference`.
pub fn neighbor_count(numbers: &[u8], reference: &[u8]) -> u32 {
    numbers
        .iter()
        .filter(|&&n| reference.contains(&(n + 1)) || (n > 0 && reference.contains(&(n - 1))))
        .count() as u32
}
