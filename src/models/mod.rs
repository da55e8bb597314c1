pub mod account;
pub mod contact;
pub mod message;
pub mod template;

#[cfg(test)]
pub mod fixtures;
