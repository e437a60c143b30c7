pub mod context;
pub mod health;
pub mod predict;

#[cfg(test)]
mod test_support;
