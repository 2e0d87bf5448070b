/// Physical destination name of a broker address.
///
/// Strips any `scheme://` prefix, then keeps the last path segment so queue
/// manager qualified addresses resolve to the queue name:
///
/// - `queue://ORDERS` -> `ORDERS`
/// - `queue:///QM1/ORDERS` -> `ORDERS`
/// - `ORDERS` -> `ORDERS`
///
/// A trailing separator is left in place rather than producing an empty name.
pub fn extract_destination_name(address: &str) -> &str {
    let name = match address.rfind("://") {
        Some(idx) => &address[idx + 3..],
        None => address,
    };

    match name.rfind('/') {
        Some(idx) if idx + 1 < name.len() => &name[idx + 1..],
        _ => name,
    }
}

/// Case-insensitive comparison of a broker address against a stub destination name
pub fn destination_matches(address: &str, stub_destination: &str) -> bool {
    extract_destination_name(address)
        .chars()
        .flat_map(char::to_lowercase)
        .eq(stub_destination.chars().flat_map(char::to_lowercase))
}
