pub mod evaluate;
pub mod generate;
pub mod inspect;
pub mod solve;
pub mod util;
