mod details;
mod fps;
mod panels;
