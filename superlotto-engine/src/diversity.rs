use std::collections::HashSet;

use superlotto_db::models::NumberMask;

use crate::enumerate::ScoredCandidate;

/// Sélection gloutonne : meilleur score d'abord, en refusant toute grille qui partage
/// au moins `max_shared` boules avec une grille déjà retenue. Si les grilles
/// diversifiées ne suffisent pas, complète avec les meilleures restantes.
///
/// `candidates` doit être trié par score décroissant.
pub fn select_diverse(candidates: &[ScoredCandidate], count: usize, max_shared: u32) -> Vec<ScoredCandidate> {
    let mut selected: Vec<ScoredCandidate> = Vec::with_capacity(count.min(candidates.len()));
    let mut masks: Vec<NumberMask> = Vec::with_capacity(count.min(candidates.len()));
    let mut taken: HashSet<u64> = HashSet::new();

    for candidate in candidates {
        if selected.len() >= count {
            break;
        }
        let mask = NumberMask::from_numbers(&candidate.balls);
        let too_close = masks.iter().any(|m| m.overlap(&mask) >= max_shared);
        if !too_close {
            masks.push(mask);
            taken.insert(candidate.seq);
            selected.push(candidate.clone());
        }
    }

    // remplissage sans contrainte de diversité
    if selected.len() < count {
        for candidate in candidates {
            if selected.len() >= count {
                break;
            }
            if taken.insert(candidate.seq) {
                selected.push(candidate.clone());
            }
        }
    }

    selected
}
