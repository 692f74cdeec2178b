pub mod solark;
