pub mod certificate;
pub mod export;
pub mod mail;
pub mod points;
pub mod suspicious;
pub mod vision;
