pub mod behavioral;
pub mod combo;
pub mod controls;
pub mod driver;
pub mod gather;
pub mod geometry;
pub mod helpers;
pub mod memory;
pub mod page;
pub mod renderer;
