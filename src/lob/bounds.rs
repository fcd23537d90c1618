use crate::error::SqlDriverError;

/// Check that `[position, position + length)` lies inside `[0, total]`.
///
/// Both large-object kinds go through this one check. It is written as
/// `length <= total - position` once `position <= total` holds, so no sum can overflow.
///
/// # Errors
/// Returns [`SqlDriverError::LobBounds`] for a negative position or length, or a range that
/// runs past `total`.
pub fn check_range(position: i64, length: i64, total: u64) -> Result<(), SqlDriverError> {
    let total_units = i64::try_from(total).unwrap_or(i64::MAX);
    if position >= 0 && length >= 0 && position <= total_units && length <= total_units - position
    {
        Ok(())
    } else {
        Err(SqlDriverError::LobBounds {
            position,
            length,
            total,
        })
    }
}
