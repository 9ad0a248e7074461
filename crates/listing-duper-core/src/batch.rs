/// Recommended rows per processing or write batch for a data set of `data_size` rows.
pub fn optimal_chunk_size(data_size: usize) -> usize {
    match data_size {
        0..=1_000 => 500,
        1_001..=5_000 => 1_000,
        5_001..=20_000 => 2_000,
        20_001..=40_000 => 3_000,
        _ => 4_000,
    }
}
