// Terminal front-end and local wallet for the mash client.

pub mod local_wallet;
pub mod terminal;
