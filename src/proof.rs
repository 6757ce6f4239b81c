use sha2::{Digest, Sha256};
use uuid::Uuid;

pub fn hash_leaf(data: &str) -> [u8; 32] {
    Sha256::digest(data.as_bytes()).into()
}

/// Leaf committing one prediction's settled reward.
pub fn reward_leaf(prediction_id: Uuid, subject: &str, reward: f64) -> [u8; 32] {
    hash_leaf(&format!("{prediction_id}:{subject}:{reward}"))
}

pub fn build_merkle_root(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    while leaves.len() > 1 {
        let mut next: Vec<[u8; 32]> = Vec::with_capacity(leaves.len().div_ceil(2));

        for pair in leaves.chunks(2) {
            let left = pair[0];
            // odd node is paired with itself
            let right = if pair.len() == 2 { pair[1] } else { pair[0] };

            let mut hasher = Sha256::new();
            hasher.update(left);
            hasher.update(right);
            next.push(hasher.finalize().into());
        }

        leaves = next;
    }

    leaves[0]
}

/// Hex root over `(prediction_id, subject, reward)` rows, ordered by id.
pub fn reward_root<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = (Uuid, &'a str, f64)>,
{
    let mut rows: Vec<_> = rows.into_iter().collect();
    rows.sort_by_key(|(id, _, _)| *id);

    let leaves = rows
        .into_iter()
        .map(|(id, subject, reward)| reward_leaf(id, subject, reward))
        .collect();

    hex::encode(build_merkle_root(leaves))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_is_zero_root() {
        assert_eq!(build_merkle_root(Vec::new()), [0u8; 32]);
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let leaf = hash_leaf("a");
        assert_eq!(build_merkle_root(vec![leaf]), leaf);
    }

    #[test]
    fn root_ignores_input_order_but_not_amounts() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let forward = reward_root([(a, "alice", 8.5), (b, "bob", 17.0)]);
        let reversed = reward_root([(b, "bob", 17.0), (a, "alice", 8.5)]);
        let changed = reward_root([(a, "alice", 8.6), (b, "bob", 17.0)]);

        assert_eq!(forward, reversed);
        assert_ne!(forward, changed);
        assert_eq!(forward.len(), 64);
    }
}
