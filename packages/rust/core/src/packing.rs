//! Greedy order-preserving grouping shared by the map and reduce stages.

/// Group `items` in order so each group's total weight stays within `limit`.
///
/// The next item joins the current group unless that would push the group
/// over `limit`; then the group is closed and a new one started. An item
/// heavier than `limit` therefore sits alone. No group is ever empty.
pub fn pack_greedy<T>(
    items: impl IntoIterator<Item = T>,
    limit: usize,
    weight: impl Fn(&T) -> usize,
) -> Vec<Vec<T>> {
    let mut groups = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut total = 0;

    for item in items {
        let w = weight(&item);
        if !current.is_empty() && total + w > limit {
            groups.push(std::mem::take(&mut current));
            total = 0;
        }
        total += w;
        current.push(item);
    }

    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
