pub mod calibre;
