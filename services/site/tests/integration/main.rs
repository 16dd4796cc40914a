mod db_test;
mod helpers;
mod http_test;
