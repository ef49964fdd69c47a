/// One stats row as seen by the ranking pass, in stable first-seen order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub wallet: String,
    pub total_transactions: i64,
    pub unique_wallets: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankAssignment {
    pub wallet: String,
    pub tx_rank: i32,
    pub wallet_rank: i32,
}

/// Assign both 1-based ranks to every row: descending by total
/// transactions and descending by unique wallets, independently. Ties
/// keep the input order, so re-ranking an unchanged set is a no-op.
pub fn recompute_rankings(rows: &[StatsSnapshot]) -> Vec<RankAssignment> {
    assert!(rows.len() <= i32::MAX as usize, "Row count exceeds rank bounds");

    let tx_ranks = ranks_descending(rows, |row| row.total_transactions);
    let wallet_ranks = ranks_descending(rows, |row| row.unique_wallets);

    rows.iter()
        .enumerate()
        .map(|(index, row)| RankAssignment {
            wallet: row.wallet.clone(),
            tx_rank: tx_ranks[index],
            wallet_rank: wallet_ranks[index],
        })
        .collect()
}

fn ranks_descending<F>(rows: &[StatsSnapshot], key: F) -> Vec<i32>
where
    F: Fn(&StatsSnapshot) -> i64,
{
    let mut order: Vec<usize> = (0..rows.len()).collect();
    // Stable sort: equal keys retain input order across passes.
    order.sort_by(|&a, &b| key(&rows[b]).cmp(&key(&rows[a])));

    let mut ranks = vec![0i32; rows.len()];
    for (position, &index) in order.iter().enumerate() {
        ranks[index] = position as i32 + 1;
    }
    assert!(ranks.iter().all(|&rank| rank >= 1), "Every row must be ranked");
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(wallet: &str, total: i64, unique: i64) -> StatsSnapshot {
        StatsSnapshot {
            wallet: wallet.to_string(),
            total_transactions: total,
            unique_wallets: unique,
        }
    }

    #[test]
    fn both_orders_are_independent() {
        let rows = vec![row("a", 100, 2), row("b", 50, 9), row("c", 75, 5)];
        let ranked = recompute_rankings(&rows);

        assert_eq!(ranked[0].tx_rank, 1);
        assert_eq!(ranked[2].tx_rank, 2);
        assert_eq!(ranked[1].tx_rank, 3);

        assert_eq!(ranked[1].wallet_rank, 1);
        assert_eq!(ranked[2].wallet_rank, 2);
        assert_eq!(ranked[0].wallet_rank, 3);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let rows = vec![row("a", 10, 1), row("b", 10, 1), row("c", 10, 1)];
        let ranked = recompute_rankings(&rows);
        assert_eq!(ranked[0].tx_rank, 1);
        assert_eq!(ranked[1].tx_rank, 2);
        assert_eq!(ranked[2].tx_rank, 3);
    }

    #[test]
    fn reranking_is_idempotent() {
        let rows = vec![
            row("a", 10, 4),
            row("b", 10, 4),
            row("c", 3, 9),
            row("d", 0, 0),
        ];
        let first = recompute_rankings(&rows);
        let second = recompute_rankings(&rows);
        assert_eq!(first, second);
    }

    #[test]
    fn zero_activity_rows_still_receive_ranks() {
        let rows = vec![row("a", 5, 1), row("b", 0, 0)];
        let ranked = recompute_rankings(&rows);
        assert_eq!(ranked[1].tx_rank, 2);
        assert_eq!(ranked[1].wallet_rank, 2);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(recompute_rankings(&[]).is_empty());
    }
}
