pub mod sw03_api; // SW03 weather board middleware
