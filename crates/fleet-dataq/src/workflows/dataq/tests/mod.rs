mod common;
mod portfolio;
mod routing;
