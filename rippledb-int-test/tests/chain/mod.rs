mod group_test;
mod reactor_test;
mod view_test;
