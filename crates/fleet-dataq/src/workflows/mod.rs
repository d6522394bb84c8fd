pub mod dataq;
